use super::*;

mod monitored_item;
mod subscription;
