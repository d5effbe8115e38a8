pub mod region_mask;
