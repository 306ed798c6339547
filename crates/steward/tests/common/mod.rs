pub mod test_cluster;
