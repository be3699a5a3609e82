//! Lattice geometry and checkerboarded field storage

use std::ops::Range;
use std::sync::Arc;
use num_complex::Complex;
use num_traits::Zero;
use crate::solver::Real;

//

/// Named subset of lattice sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subset
{
    /// All sites.
    Full,
    /// Sites whose coordinate sum is even.
    Even,
    /// Sites whose coordinate sum is odd.
    Odd,
}

impl Subset
{
    /// The opposite checkerboard. [`Subset::Full`] maps to itself.
    pub fn other(self) -> Self
    {
        match self {
            Subset::Full => Subset::Full,
            Subset::Even => Subset::Odd,
            Subset::Odd => Subset::Even,
        }
    }

    /// Checks whether every site of `sub` belongs to `self`.
    pub fn contains(self, sub: Subset) -> bool
    {
        self == Subset::Full || self == sub
    }
}

//

/// Periodic hypercubic lattice with checkerboard site ordering.
///
/// Sites are addressed either lexicographically (first dimension runs fastest)
/// or by storage index.
/// Storage places every even site first and every odd site after them,
/// each group in lexicographic order,
/// so that a checkerboard of a [`Field`] is a contiguous slice.
#[derive(Debug, Clone)]
pub struct Lattice
{
    dims: Vec<usize>,
    vol: usize,
    n_even: usize,
    lex_to_idx: Vec<usize>,
    idx_to_lex: Vec<usize>,
}

impl Lattice
{
    /// Creates an instance.
    ///
    /// Returns [`Lattice`] instance.
    /// * `dims` are the extents of every dimension, typically 4 or 5 of them.
    ///   None of them shall be zero.
    pub fn new(dims: &[usize]) -> Self
    {
        assert!(!dims.is_empty());
        assert!(dims.iter().all(|&d| d > 0));

        let vol = dims.iter().product::<usize>();

        let parities: Vec<bool> = (0.. vol)
            .map(|lex| Self::coord_sum(dims, lex) % 2 == 1)
            .collect();
        let n_even = parities.iter().filter(|&&odd| !odd).count();

        let mut lex_to_idx = vec![0; vol];
        let mut idx_to_lex = vec![0; vol];
        let mut i_even = 0;
        let mut i_odd = n_even;
        for (lex, &odd) in parities.iter().enumerate() {
            let idx = if odd {
                i_odd += 1;
                i_odd - 1
            }
            else {
                i_even += 1;
                i_even - 1
            };
            lex_to_idx[lex] = idx;
            idx_to_lex[idx] = lex;
        }

        log::trace!("lattice {:?}: vol {} even {} odd {}", dims, vol, n_even, vol - n_even);

        Lattice {
            dims: dims.to_vec(),
            vol,
            n_even,
            lex_to_idx,
            idx_to_lex,
        }
    }

    /// Creates an instance shared by reference counting, as [`Field`] requires.
    pub fn shared(dims: &[usize]) -> Arc<Self>
    {
        Arc::new(Self::new(dims))
    }

    fn coord_sum(dims: &[usize], mut lex: usize) -> usize
    {
        let mut sum = 0;
        for d in dims {
            sum += lex % d;
            lex /= d;
        }
        sum
    }

    /// Extents of every dimension.
    pub fn dims(&self) -> &[usize]
    {
        &self.dims
    }

    /// Number of dimensions.
    pub fn n_dims(&self) -> usize
    {
        self.dims.len()
    }

    /// Total number of sites.
    pub fn vol(&self) -> usize
    {
        self.vol
    }

    /// Whether nearest-neighbour hops always connect opposite checkerboards,
    /// which holds when every extent is even.
    pub fn is_bipartite(&self) -> bool
    {
        self.dims.iter().all(|d| d % 2 == 0)
    }

    /// Number of sites in a subset.
    pub fn subset_len(&self, s: Subset) -> usize
    {
        self.subset_range(s).len()
    }

    /// Range of storage indices occupied by a subset.
    pub fn subset_range(&self, s: Subset) -> Range<usize>
    {
        match s {
            Subset::Full => 0.. self.vol,
            Subset::Even => 0.. self.n_even,
            Subset::Odd => self.n_even.. self.vol,
        }
    }

    /// Coordinates of a site given its lexicographic index.
    pub fn coords(&self, mut lex: usize) -> Vec<usize>
    {
        assert!(lex < self.vol);

        self.dims.iter()
            .map(|d| {
                let c = lex % d;
                lex /= d;
                c
            })
            .collect()
    }

    /// Lexicographic index of a site given its coordinates.
    pub fn lex(&self, coords: &[usize]) -> usize
    {
        assert_eq!(coords.len(), self.dims.len());

        let mut lex = 0;
        for (c, d) in coords.iter().zip(&self.dims).rev() {
            assert!(c < d);
            lex = lex * d + c;
        }
        lex
    }

    /// Checkerboard of a site given its lexicographic index.
    pub fn parity(&self, lex: usize) -> Subset
    {
        if self.lex_to_idx[lex] < self.n_even {
            Subset::Even
        }
        else {
            Subset::Odd
        }
    }

    /// Storage index of a site given its lexicographic index.
    pub fn index(&self, lex: usize) -> usize
    {
        self.lex_to_idx[lex]
    }

    /// Lexicographic index of a site given its storage index.
    pub fn site(&self, idx: usize) -> usize
    {
        self.idx_to_lex[idx]
    }

    /// Lexicographic index of the site at offset `+1` (`forward`) or `-1`
    /// from `lex` in dimension `mu`, periodically wrapped.
    pub fn neighbor(&self, lex: usize, mu: usize, forward: bool) -> usize
    {
        assert!(mu < self.dims.len());

        let stride = self.dims[.. mu].iter().product::<usize>();
        let d = self.dims[mu];
        let c = (lex / stride) % d;
        let c_nb = if forward {
            (c + 1) % d
        }
        else {
            (c + d - 1) % d
        };

        lex - c * stride + c_nb * stride
    }
}

impl PartialEq for Lattice
{
    fn eq(&self, other: &Self) -> bool
    {
        self.dims == other.dims
    }
}

impl Eq for Lattice {}

//

/// Complex-valued lattice field.
///
/// One complex value per site over the whole lattice, stored in checkerboard order
/// (see [`Lattice`]).
/// Solvers and operators work on the restriction [`Field::sub`] to their subset.
#[derive(Debug, Clone, PartialEq)]
pub struct Field<F: Real>
{
    lattice: Arc<Lattice>,
    data: Vec<Complex<F>>,
}

impl<F: Real> Field<F>
{
    /// Creates a zero field.
    pub fn zeros(lattice: &Arc<Lattice>) -> Self
    {
        Field {
            lattice: lattice.clone(),
            data: vec![Complex::zero(); lattice.vol()],
        }
    }

    /// Creates a field whose value at each site is given by `g` called with the site coordinates.
    pub fn from_fn<G>(lattice: &Arc<Lattice>, mut g: G) -> Self
    where G: FnMut(&[usize]) -> Complex<F>
    {
        let mut data = vec![Complex::zero(); lattice.vol()];
        for (idx, v) in data.iter_mut().enumerate() {
            let coords = lattice.coords(lattice.site(idx));
            *v = g(coords.as_slice());
        }

        Field {
            lattice: lattice.clone(),
            data,
        }
    }

    /// Lattice on which the field lives.
    pub fn lattice(&self) -> &Arc<Lattice>
    {
        &self.lattice
    }

    /// Sets every site of a subset to `val`.
    pub fn fill(&mut self, s: Subset, val: Complex<F>)
    {
        for v in self.sub_mut(s) {
            *v = val;
        }
    }

    /// Restriction to a subset.
    pub fn sub(&self, s: Subset) -> &[Complex<F>]
    {
        &self.data[self.lattice.subset_range(s)]
    }

    /// Mutable restriction to a subset.
    pub fn sub_mut(&mut self, s: Subset) -> &mut [Complex<F>]
    {
        let range = self.lattice.subset_range(s);
        &mut self.data[range]
    }

    /// Even and odd checkerboards.
    pub fn split_cb(&self) -> (&[Complex<F>], &[Complex<F>])
    {
        self.data.split_at(self.lattice.subset_len(Subset::Even))
    }

    /// Even and odd checkerboards, mutable.
    pub fn split_cb_mut(&mut self) -> (&mut [Complex<F>], &mut [Complex<F>])
    {
        let n_even = self.lattice.subset_len(Subset::Even);
        self.data.split_at_mut(n_even)
    }

    /// Value at the site of lexicographic index `lex`.
    pub fn site(&self, lex: usize) -> Complex<F>
    {
        self.data[self.lattice.index(lex)]
    }

    /// Sets the value at the site of lexicographic index `lex`.
    pub fn set_site(&mut self, lex: usize, val: Complex<F>)
    {
        let idx = self.lattice.index(lex);
        self.data[idx] = val;
    }

    /// Copy of this field in another storage precision.
    pub fn to_precision<G: Real>(&self) -> Field<G>
    {
        Field {
            lattice: self.lattice.clone(),
            data: self.data.iter()
                .map(|v| Complex::new(G::round_from(v.re.widen()), G::round_from(v.im.widen())))
                .collect(),
        }
    }
}

//

#[test]
fn test_lattice_checkerboard()
{
    let lat = Lattice::new(&[4, 4, 4, 4]);

    assert_eq!(lat.vol(), 256);
    assert_eq!(lat.subset_len(Subset::Even), 128);
    assert_eq!(lat.subset_len(Subset::Odd), 128);
    assert!(lat.is_bipartite());

    for lex in 0.. lat.vol() {
        let coords = lat.coords(lex);
        assert_eq!(lat.lex(&coords), lex);
        assert_eq!(lat.site(lat.index(lex)), lex);

        let expect = if coords.iter().sum::<usize>() % 2 == 0 {Subset::Even} else {Subset::Odd};
        assert_eq!(lat.parity(lex), expect);
        assert!(lat.subset_range(expect).contains(&lat.index(lex)));

        for mu in 0.. lat.n_dims() {
            let fw = lat.neighbor(lex, mu, true);
            assert_eq!(lat.neighbor(fw, mu, false), lex);
            assert_eq!(lat.parity(fw), expect.other());
        }
    }
}

#[test]
fn test_lattice_odd_volume()
{
    let lat = Lattice::new(&[3, 3, 1, 1, 3]);

    assert_eq!(lat.vol(), 27);
    assert_eq!(lat.subset_len(Subset::Even), 14);
    assert_eq!(lat.subset_len(Subset::Odd), 13);
    assert!(!lat.is_bipartite());
    assert_eq!(lat.neighbor(lat.lex(&[2, 0, 0, 0, 1]), 0, true), lat.lex(&[0, 0, 0, 0, 1]));
    assert_eq!(lat.neighbor(lat.lex(&[1, 0, 0, 0, 0]), 4, false), lat.lex(&[1, 0, 0, 0, 2]));
}

#[test]
fn test_field_subsets()
{
    let lat = Lattice::shared(&[2, 2, 2, 2]);
    let mut f = Field::<f64>::from_fn(&lat, |c| {
        Complex::new(c.iter().sum::<usize>() as f64, 0.)
    });

    for v in f.sub(Subset::Even) {
        assert_eq!(v.re as usize % 2, 0);
    }
    for v in f.sub(Subset::Odd) {
        assert_eq!(v.re as usize % 2, 1);
    }

    f.fill(Subset::Odd, Complex::new(-1., 2.));
    let (even, odd) = f.split_cb();
    assert_eq!(even.len(), 8);
    assert!(odd.iter().all(|v| *v == Complex::new(-1., 2.)));

    let lex = lat.lex(&[1, 1, 0, 1]);
    assert_eq!(f.site(lex), Complex::new(-1., 2.));
    f.set_site(lex, Complex::new(5., 0.));
    assert_eq!(f.site(lex), Complex::new(5., 0.));

    let g = f.to_precision::<f32>();
    assert_eq!(g.site(lex), Complex::new(5f32, 0.));
    assert_eq!(g.lattice(), f.lattice());
}
