mod test_disconnect_is_implicit_leave;
mod test_leave_notifies_remaining;
