use crate::event::Command;
use crate::hcall;

#[derive(Default, Copy, Clone, Debug)]
pub struct Constraint {
    pub cmd: Command,
    pub arg_num: usize,
    pub ret_num: usize,
}

impl Constraint {
    pub fn new(cmd: Command, arg_num: usize, ret_num: usize) -> Constraint {
        Constraint {
            cmd,
            arg_num,
            ret_num,
        }
    }
}

pub fn pick(cmd: Command) -> Option<Constraint> {
    let constraint = match cmd {
        hcall::H_PUT_TCE => Constraint::new(hcall::H_PUT_TCE, 3, 1),
        hcall::H_STUFF_TCE => Constraint::new(hcall::H_STUFF_TCE, 4, 1),
        hcall::H_PUT_TCE_INDIRECT => Constraint::new(hcall::H_PUT_TCE_INDIRECT, 4, 1),
        _ => return None,
    };
    Some(constraint)
}

pub fn validate<T, G, R>(cmd: Command, ok_func: T, else_func: G) -> R
where
    T: FnOnce(usize, usize) -> R,
    G: FnOnce() -> R,
{
    match pick(cmd) {
        Some(c) => ok_func(c.arg_num, c.ret_num),
        None => else_func(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_hcalls() {
        assert_eq!(pick(hcall::H_PUT_TCE).map(|c| c.arg_num), Some(3));
        assert_eq!(pick(hcall::H_STUFF_TCE).map(|c| c.arg_num), Some(4));
        assert_eq!(pick(hcall::H_PUT_TCE_INDIRECT).map(|c| c.arg_num), Some(4));
        assert!(pick(0x4).is_none());
    }
}
