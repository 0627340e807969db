use std::net::Ipv4Addr;

use cidr_range::HostRange;

/// The unallocated host addresses of a pool, handed out last-in first-out.
///
/// Conceptually this is the pool's host range in ascending order with released addresses
/// appended, popped from the end. The part of the host range that was never handed out is
/// kept as a lazy range so that large blocks do not need to be materialized.
#[derive(Debug, Clone)]
pub struct AvailableStack {
    /// Host addresses that have never been issued, in ascending order
    untouched: HostRange,
    /// Addresses returned to the pool, most recent last
    released: Vec<Ipv4Addr>,
}

impl AvailableStack {
    /// Construct a stack holding every address in `hosts`
    #[must_use]
    pub fn new(hosts: HostRange) -> Self {
        Self {
            untouched: hosts,
            released: Vec::new(),
        }
    }

    /// Take the address at the top of the stack
    #[profiling::function]
    pub fn pop(&mut self) -> Option<Ipv4Addr> {
        self.released.pop().or_else(|| self.untouched.next_back())
    }

    /// Put an address on top of the stack
    #[profiling::function]
    pub fn push(&mut self, addr: Ipv4Addr) {
        self.released.push(addr);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.untouched.len() + self.released.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.untouched.is_empty() && self.released.is_empty()
    }

    /// Check if an address is waiting to be issued
    #[cfg(test)]
    #[must_use]
    pub(crate) fn contains(&self, addr: Ipv4Addr) -> bool {
        self.untouched.contains(addr) || self.released.contains(&addr)
    }

    /// Iterate from the bottom of the stack to the top
    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.untouched.chain(self.released.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use cidr_range::CidrRange;

    use super::*;

    fn stack(cidr: &str) -> AvailableStack {
        AvailableStack::new(CidrRange::parse(cidr).unwrap().hosts())
    }

    #[test]
    fn test_pops_highest_first() {
        let mut available = stack("10.0.0.0/29");
        assert_eq!(available.len(), 5);
        assert_eq!(available.pop(), Some(Ipv4Addr::new(10, 0, 0, 6)));
        assert_eq!(available.pop(), Some(Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(available.len(), 3);
    }

    #[test]
    fn test_released_addresses_come_back_first() {
        let mut available = stack("10.0.0.0/29");
        let first = available.pop().unwrap();
        let second = available.pop().unwrap();
        available.push(first);
        available.push(second);
        assert_eq!(available.pop(), Some(second));
        assert_eq!(available.pop(), Some(first));
        assert_eq!(available.pop(), Some(Ipv4Addr::new(10, 0, 0, 4)));
    }

    #[test]
    fn test_iteration_order() {
        let mut available = stack("10.0.0.0/29");
        let top = available.pop().unwrap();
        available.push(top);
        let low = Ipv4Addr::new(10, 0, 0, 2);
        assert!(available.contains(low));
        assert_eq!(
            available.iter().collect::<Vec<_>>(),
            vec![
                low,
                Ipv4Addr::new(10, 0, 0, 3),
                Ipv4Addr::new(10, 0, 0, 4),
                Ipv4Addr::new(10, 0, 0, 5),
                top,
            ]
        );
    }

    #[test]
    fn test_drains_to_empty() {
        let mut available = stack("10.0.0.0/30");
        assert_eq!(available.pop(), Some(Ipv4Addr::new(10, 0, 0, 2)));
        assert!(available.is_empty());
        assert_eq!(available.pop(), None);
    }
}
