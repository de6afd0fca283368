mod common;
mod notifications;
mod transitions;
