mod config;
mod logging;
