#[macro_use]
extern crate rust_i18n;

i18n!("locales", fallback = "en");

pub mod bot;
pub mod calculator;
pub mod config;
pub mod db;
pub mod deadlines;
pub mod lms;
pub mod logging;
pub mod services;
pub mod telegram;
