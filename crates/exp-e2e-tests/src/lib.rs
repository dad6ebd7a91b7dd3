//! End-to-end scenarios spanning the routing engine, bus, cache, and
//! publisher. No production code lives here — see `tests/` for the
//! scenarios themselves.
