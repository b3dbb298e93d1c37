mod every_n;
mod scoped_timer;

pub(crate) use every_n::*;
pub(crate) use scoped_timer::*;
