pub mod favorite_tea;
pub mod tea;
pub mod tea_review;
pub mod user;
