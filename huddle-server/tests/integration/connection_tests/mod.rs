mod test_socket_drop_is_implicit_leave;
