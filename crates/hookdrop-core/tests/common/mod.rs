#![allow(dead_code)]

pub mod fixtures;
pub mod webhook_server;
