//! End-to-end flows across invoker, transport and provider.

#[cfg(test)]
mod support;

#[cfg(test)]
mod calls;
#[cfg(test)]
mod discovery;
