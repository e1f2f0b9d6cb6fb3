#![allow(dead_code)]

pub mod config;
pub mod services;
pub mod wire;
