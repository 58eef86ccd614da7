mod test_mongo_store;
mod test_replay;
