mod test_relay_requires_shared_room;
