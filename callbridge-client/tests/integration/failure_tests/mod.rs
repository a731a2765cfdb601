mod test_busy_callee;
mod test_unreachable_target;
