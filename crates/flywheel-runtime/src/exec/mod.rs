mod router;

pub use router::ExecutionRouter;
