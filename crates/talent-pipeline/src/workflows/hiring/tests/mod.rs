mod common;

mod interviews;
mod jobs;
mod store;
