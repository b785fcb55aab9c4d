#[cfg(test)]
mod modules;
