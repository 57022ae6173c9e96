mod support;
mod test_channel;
mod test_pipeline;
