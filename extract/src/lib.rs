pub mod category;
pub mod classify;
pub mod config;
pub mod extract;
pub mod geometry;
pub mod graph;
pub mod ignore;
pub mod names;
pub mod osm;
pub mod rest;
pub mod roads;
pub mod rules;
pub mod tags;

use std::error::Error;

pub type Result<T> = std::result::Result<T, Box<dyn Error>>;
