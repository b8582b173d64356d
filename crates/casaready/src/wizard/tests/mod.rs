mod common;
mod controller;
mod submission;
