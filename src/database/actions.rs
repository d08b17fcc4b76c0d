pub mod folders;
pub mod recipes;
pub mod tags;
pub mod users;
