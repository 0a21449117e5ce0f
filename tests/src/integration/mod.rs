mod reconnect_hash_match;
mod state_out_of_order;
