mod index_cache_test;
mod open_close_test;
