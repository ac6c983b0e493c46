use super::*;

mod lifetime;
