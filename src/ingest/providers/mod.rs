pub mod fixture;
pub mod google_places;
