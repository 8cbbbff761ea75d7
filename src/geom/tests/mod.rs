mod test_chain_basic;
mod test_curve_basic;
mod test_surface_basic;
mod test_triangulation_basic;
mod test_trim_basic;
