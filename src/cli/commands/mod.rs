pub mod earthquakes;
pub mod health;
pub mod organizations;
pub mod users;
