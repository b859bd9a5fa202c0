mod test_publish_reaches_remote;
