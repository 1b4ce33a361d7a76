mod test_invalid_peer_id_rejected;
