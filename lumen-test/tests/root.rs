mod lifecycle;
mod resources;
