//! Domain logic modules for the table engine.
//!
//! This module contains pure functions over the mirror:
//! - Filtering (filter tree evaluation, operator metadata)
//! - Sorting (stable multi-key ordering)
//! - Search (case-insensitive free text)
//! - Visibility (hidden columns)
//! - Navigation (arrow-key movement over the visible grid)
//! - View (the combined projection)

pub mod filtering;
pub mod navigation;
pub mod search;
pub mod sorting;
pub mod view;
pub mod visibility;
