pub mod filter;
pub mod row;
pub mod table;
