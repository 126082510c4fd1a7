#![cfg(not(doctest))]

#[macro_use]
extern crate diesel;

pub mod db;
pub mod models;
pub mod policy;
pub mod request_io;
pub mod schema;
pub mod storage;
pub mod threadrand;
pub mod token;
pub mod validators;
