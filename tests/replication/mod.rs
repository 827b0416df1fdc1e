mod bootstrap_sync_test;
mod endpoint_test;
mod propagation_test;
mod read_repair_test;
