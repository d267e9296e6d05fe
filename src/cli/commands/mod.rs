pub mod poi;
pub mod polygons;
