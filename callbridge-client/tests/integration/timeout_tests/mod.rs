mod test_ring_timeout;
