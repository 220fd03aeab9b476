pub mod data_core;
pub mod mapper;
pub mod xml_tree;
