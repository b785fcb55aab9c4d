use kumo::sim::Ram;
use kumo::*;

use std::sync::Arc;

pub fn counter<'a>(c: &'a Context<'a>) -> &'a Module<'a> {
    let m = c.module("Counter");
    let enable = m.input("enable", 1);
    let count = m.output("count", 2);
    let value = m.reg("value", 2);
    value.reset_value(0u32);
    m.update(|b| {
        b.if_(enable.current(), |b| {
            b.assign(value, value.current() + m.lit(1u32, 2));
        });
        b.assign(count, value.current());
    });
    m
}

pub fn nested_guards<'a>(c: &'a Context<'a>) -> &'a Module<'a> {
    let m = c.module("NestedGuards");
    let a = m.input("a", 1);
    let b_ = m.input("b", 1);
    let c_ = m.input("c", 1);
    let o = m.output("o", 4);
    m.update(|b| {
        b.assign(o, m.lit(1u32, 4));
        b.if_(a.current(), |b| {
            b.assign(o, m.lit(2u32, 4));
            b.if_(b_.current(), |b| {
                b.assign(o, m.lit(3u32, 4));
                b.if_(c_.current(), |b| {
                    b.assign(o, m.lit(4u32, 4));
                });
            });
        });
    });
    m
}

pub fn pipeline<'a>(c: &'a Context<'a>) -> &'a Module<'a> {
    let m = c.module("Pipeline");
    let i = m.input("i", 8);
    let o1 = m.output("o1", 8);
    let o2 = m.output("o2", 8);
    let r1 = m.reg("r1", 8);
    let r2 = m.reg("r2", 8);
    r2.reset_value(0xffu32);
    m.update(|b| {
        b.assign(r1, i.current());
        b.assign(r2, r1.current());
        b.assign(o1, r1.current());
        b.assign(o2, r2.current());
    });
    m
}

/// `Top` wraps `Mid`, which chains two `Leaf` incrementers.
pub fn hierarchy<'a>(c: &'a Context<'a>) -> &'a Module<'a> {
    let leaf = c.module("Leaf");
    let li = leaf.input("i", 8);
    let lo = leaf.output("o", 8);
    leaf.update(|b| b.assign(lo, li.current() + leaf.lit(1u32, 8)));

    let mid = c.module("Mid");
    let mi = mid.input("i", 8);
    let mo = mid.output("o", 8);
    let total = mid.reg("total", 8);
    let leaf0 = mid.instance("leaf0", "Leaf");
    let leaf1 = mid.instance("leaf1", "Leaf");
    mid.update(|b| {
        b.assign(leaf0.port("i"), mi.current());
        b.assign(leaf1.port("i"), leaf0.port("o").current());
        b.assign(total, total.current() + leaf1.port("o").current());
        b.assign(mo, leaf1.port("o").current());
    });

    let top = c.module("Top");
    let x = top.input("x", 8);
    let y = top.output("y", 8);
    let sum = top.output("sum", 8);
    let m = top.instance("mid", "Mid");
    top.update(|b| {
        b.assign(m.port("i"), x.current());
        b.assign(y, m.port("o").current());
        b.assign(sum, m.port("o").current() + x.current());
    });
    top
}

pub fn feedback_loop<'a>(c: &'a Context<'a>) -> &'a Module<'a> {
    let m = c.module("FeedbackLoop");
    let a = m.wire("a", 1);
    let o = m.output("o", 1);
    m.update(|b| {
        b.assign(a, !o.current());
        b.assign(o, a.current());
    });
    m
}

pub fn toggle<'a>(c: &'a Context<'a>) -> &'a Module<'a> {
    let m = c.module("Toggle");
    let r = m.reg("r", 1);
    let a = m.wire("a", 1);
    let o = m.output("o", 1);
    m.update(|b| {
        b.assign(a, !r.current());
        b.assign(r, a.current());
        b.assign(o, r.current());
    });
    m
}

pub fn one_armed_if<'a>(c: &'a Context<'a>, covered: bool) -> &'a Module<'a> {
    let m = c.module("OneArmedIf");
    let sel = m.input("sel", 1);
    let o = m.output("o", 4);
    m.update(|b| {
        let chain = b.if_(sel.current(), |b| b.assign(o, m.lit(5u32, 4)));
        if covered {
            chain.else_(|b| b.assign(o, m.lit(9u32, 4)));
        }
    });
    m
}

pub fn popcount<'a>(c: &'a Context<'a>) -> &'a Module<'a> {
    let m = c.module("Popcount");
    let i = m.input("i", 4);
    let o = m.output("o", 3);
    let acc = m.local("acc", 3);
    m.update(|b| {
        b.assign(acc, m.lit(0u32, 3));
        b.for_range(0..4, |b, index| {
            b.if_(i.current().shr(index).bit(0), |b| {
                b.assign(acc, acc.current() + m.lit(1u32, 3));
            });
        });
        b.assign(o, acc.current());
    });
    m
}

fn bus_producer<'a>(c: &'a Context<'a>) {
    let m = c.module("Producer");
    let bus = m.interface("bus", |i| {
        i.output("data", 8);
        i.output("valid", 1);
        i.input("ready", 1);
    });
    let count = m.reg("count", 8);
    m.update(|b| {
        b.if_(bus.signal("ready").current(), |b| {
            b.assign(count, count.current() + m.lit(1u32, 8));
        });
        b.assign(bus.signal("data"), count.current());
        b.assign(bus.signal("valid"), m.high());
    });
}

fn bus_consumer<'a>(c: &'a Context<'a>) {
    let m = c.module("Consumer");
    let bus = m.interface("bus", |i| {
        i.input("data", 8);
        i.input("valid", 1);
        i.output("ready", 1);
    });
    let seen = m.output("seen", 8);
    m.update(|b| {
        b.assign(bus.signal("ready"), bus.signal("valid").current());
        b.assign(seen, bus.signal("data").current());
    });
}

/// A producer and a consumer wired together by joining their `bus` interfaces, in either argument order.
pub fn joined<'a>(c: &'a Context<'a>, swapped: bool) -> &'a Module<'a> {
    bus_producer(c);
    bus_consumer(c);

    let top = c.module("Joined");
    let seen = top.output("seen", 8);
    let p = top.instance("p", "Producer");
    let q = top.instance("q", "Consumer");
    top.update(|b| {
        if swapped {
            b.join(q.interface("bus"), p.interface("bus"));
        } else {
            b.join(p.interface("bus"), q.interface("bus"));
        }
        b.assign(seen, q.port("seen").current());
    });
    top
}

pub fn state_enum() -> Arc<EnumLayout> {
    EnumBuilder::new("State")
        .variant("Idle")
        .variant_with_fields("Busy", &[("count", 2)])
        .variant("Done")
        .build()
}

/// Idle -> Busy(0..=3) -> Done -> Idle, leaving Idle when `go` is high.
pub fn fsm<'a>(c: &'a Context<'a>, state: &Arc<EnumLayout>, handle_done: bool) -> &'a Module<'a> {
    let m = c.module("Fsm");
    let go = m.input("go", 1);
    let busy = m.output("busy", 1);
    let done = m.output("done", 1);
    let s = m.reg("s", state);
    m.update(|b| {
        b.match_(s.current(), |arms| {
            arms.variant("Idle", |b| {
                b.if_(go.current(), |b| {
                    b.assign(s, m.variant(state, "Busy", &[m.lit(0u32, 2)]));
                });
            })
            .variant("Busy", |b| {
                let count = s.current().field("Busy", "count");
                b.if_(count.eq(m.lit(3u32, 2)), |b| {
                    b.assign(s, m.variant(state, "Done", &[]));
                })
                .else_(|b| {
                    b.assign(s, m.variant(state, "Busy", &[count + m.lit(1u32, 2)]));
                });
            });
            if handle_done {
                arms.variant("Done", |b| {
                    b.assign(s, m.variant(state, "Idle", &[]));
                });
            }
        });
        b.assign(busy, s.current().is_variant("Busy"));
        b.assign(done, s.current().is_variant("Done"));
    });
    m
}

/// A register file in front of a black-box [`Ram`].
pub fn ram_wrapper<'a>(c: &'a Context<'a>) -> &'a Module<'a> {
    let ram = c.black_box("Ram", || Ram::new(16));
    ram.input("addr", 4);
    ram.input("write_enable", 1);
    ram.input("write_data", 8);
    ram.output("read_data", 8);

    let m = c.module("RamWrapper");
    let addr = m.input("addr", 4);
    let we = m.input("we", 1);
    let data = m.input("data", 8);
    let q = m.output("q", 8);
    let mem = m.instance("mem", "Ram");
    m.update(|b| {
        b.assign(mem.port("addr"), addr.current());
        b.assign(mem.port("write_enable"), we.current());
        b.assign(mem.port("write_data"), data.current());
        b.assign(q, mem.port("read_data").current());
    });
    m
}

struct Silent;

impl BlackBox for Silent {
    fn update(&mut self, _io: &mut BlackBoxIo) {}
}

/// Wraps a black box that never drives its output.
pub fn silent_wrapper<'a>(c: &'a Context<'a>) -> &'a Module<'a> {
    let silent = c.black_box("Silent", || Silent);
    silent.input("i", 1);
    silent.output("o", 1);

    let m = c.module("SilentWrapper");
    let i = m.input("i", 1);
    let o = m.output("o", 1);
    let s = m.instance("s", "Silent");
    m.update(|b| {
        b.assign(s.port("i"), i.current());
        b.assign(o, s.port("o").current());
    });
    m
}

/// Counts the set bits of a 32-bit input by accumulating into a local across an unrolled loop.
pub fn popcount32<'a>(c: &'a Context<'a>) -> &'a Module<'a> {
    let m = c.module("Popcount32");
    let i = m.input("i", 32);
    let o = m.output("o", 6);
    let acc = m.local("acc", 6);
    m.update(|b| {
        b.assign(acc, m.lit(0u32, 6));
        b.for_range(0..32, |b, index| {
            b.if_(i.current().shr(index).bit(0), |b| {
                b.assign(acc, acc.current() + m.lit(1u32, 6));
            });
        });
        b.assign(o, acc.current());
    });
    m
}

/// `stages` incrementers in series, connected from the last stage back to the first.
pub fn increment_chain<'a>(c: &'a Context<'a>, stages: usize) -> &'a Module<'a> {
    let inc = c.module("Increment");
    let i = inc.input("i", 8);
    let o = inc.output("o", 8);
    inc.update(|b| b.assign(o, i.current() + inc.lit(1u32, 8)));

    let m = c.module("IncrementChain");
    let x = m.input("x", 8);
    let y = m.output("y", 8);
    let stages = (0..stages)
        .map(|index| m.instance(format!("s{}", index), "Increment"))
        .collect::<Vec<_>>();
    m.update(|b| {
        b.assign(y, stages[stages.len() - 1].port("o").current());
        for index in (1..stages.len()).rev() {
            b.assign(stages[index].port("i"), stages[index - 1].port("o").current());
        }
        b.assign(stages[0].port("i"), x.current());
    });
    m
}

/// A signed running total with sign and halving outputs.
pub fn signed_accumulator<'a>(c: &'a Context<'a>) -> &'a Module<'a> {
    let m = c.module("SignedAccumulator");
    let delta = m.signal("delta", Direction::Input, Kind::Signed(8));
    let half = m.signal("half", Direction::Output, Kind::Signed(16));
    let negative = m.output("negative", 1);
    let total = m.reg("total", Kind::Signed(16));
    m.update(|b| {
        b.assign(total, total.current() + delta.current().resize(16));
        b.assign(half, total.current().shr(m.lit(1u32, 1)));
        b.assign(negative, total.current().lt(m.lit(0u32, 16).as_signed()));
    });
    m
}

pub fn pixel_layout() -> Arc<StructLayout> {
    StructBuilder::new("Pixel")
        .member("r", 4u32)
        .member("g", 4u32)
        .build()
}

/// Swaps the members of a struct and picks one element out of an array.
pub fn aggregates<'a>(c: &'a Context<'a>, pixel: &Arc<StructLayout>) -> &'a Module<'a> {
    let m = c.module("Aggregates");
    let p = m.signal("pixel", Direction::Input, pixel);
    let lanes = m.signal("lanes", Direction::Input, &ArrayLayout::new(2u32, 4));
    let swapped = m.signal("swapped", Direction::Output, pixel);
    let red = m.output("red", 4);
    let third = m.output("third", 2);
    let reversed = m.signal("reversed", Direction::Output, &ArrayLayout::new(2u32, 4));
    m.update(|b| {
        let p = p.current();
        b.assign(swapped, m.structure(pixel, &[p.member("g"), p.member("r")]));
        b.assign(red, p.member("r"));
        let lanes = lanes.current();
        b.assign(third, lanes.index(2));
        b.assign(
            reversed,
            m.array(&[lanes.index(3), lanes.index(2), lanes.index(1), lanes.index(0)]),
        );
    });
    m
}

/// Decodes a [`state_enum`] value driven from outside.
pub fn state_decoder<'a>(c: &'a Context<'a>, state: &Arc<EnumLayout>) -> &'a Module<'a> {
    let m = c.module("StateDecoder");
    let s = m.signal("state", Direction::Input, state);
    let busy = m.output("busy", 1);
    m.update(|b| b.assign(busy, s.current().is_variant("Busy")));
    m
}
