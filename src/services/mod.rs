pub mod admission;
pub mod calendar;
pub mod conflict;
pub mod materializer;
