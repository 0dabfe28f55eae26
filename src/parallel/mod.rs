mod loops;

pub use loops::parallel_map;
