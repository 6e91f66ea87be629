pub trait ConstInit: Sized {
    const INIT: Self;
}

impl<T: ConstInit, const N: usize> ConstInit for [T; N] {
    const INIT: Self = [T::INIT; N];
}
