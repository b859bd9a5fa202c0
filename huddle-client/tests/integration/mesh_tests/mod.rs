mod test_disconnect_closes_link;
mod test_offer_from_outside_roster_ignored;
