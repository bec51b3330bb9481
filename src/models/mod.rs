// src/models/mod.rs

pub mod attempt;
pub mod exam_result;
pub mod question;
pub mod schedule;
pub mod user;
