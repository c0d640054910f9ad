mod common;
mod submitter;
