pub(crate) mod backend;

pub(crate) mod keys;

pub(crate) mod logging;

pub(crate) mod network;

pub(crate) mod node;

pub(crate) mod rootchain;
