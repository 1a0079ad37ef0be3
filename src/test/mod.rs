//! End-to-end fixtures exercising whole scenarios rather than single units.
