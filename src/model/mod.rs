//! Data model for tables, rows, cells and views.

mod table;
mod view;

pub use table::{CellUpdate, Column, ColumnType, IntoCellValue, Row, TableData, TableInfo};
pub use view::{
    Combinator, FilterCondition, FilterGroup, FilterOperator, SortConfig, SortDirection, View,
    ViewConfig,
};
