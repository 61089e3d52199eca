pub mod age;
pub mod person;
pub mod statement;
