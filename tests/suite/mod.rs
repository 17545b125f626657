mod counter_server;
mod wire;
